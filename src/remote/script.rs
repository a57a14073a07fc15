//! 远程 PowerShell 脚本构建
//!
//! 所有路径和模式都作为单引号字面量嵌入，脚本输出统一为 JSON。

/// PowerShell 单引号字面量
pub fn quote(value: &str) -> String {
    format!("'{}'", value.replace('\'', "''"))
}

fn bool_literal(value: bool) -> &'static str {
    if value {
        "$true"
    } else {
        "$false"
    }
}

/// 与本地 `format_size` 相同的截断规则
const FORMAT_SIZE_FN: &str = r#"
function Format-Size([long]$bytes) {
    if ($bytes -lt 1024) { return "$bytes Bytes" }
    if ($bytes -lt 1048576) { $unit = [long]1024; $name = 'KB' }
    elseif ($bytes -lt 1073741824) { $unit = [long]1048576; $name = 'MB' }
    else { $unit = [long]1073741824; $name = 'GB' }
    $whole = [Math]::Floor($bytes / $unit)
    $rem = $bytes % $unit
    if ($whole -ge 100) { return "$whole $name" }
    if ($whole -lt 10) {
        $frac = [Math]::Floor($rem * 100 / $unit)
        return "$whole,$($frac.ToString('00')) $name"
    }
    $frac = [Math]::Floor($rem * 10 / $unit)
    if ($frac -eq 0 -and $name -ne 'KB') { return "$whole $name" }
    return "$whole,$frac $name"
}
"#;

/// 枚举并读取版本信息；`base` 用于计算相对路径，`roots` 为实际枚举的目录
pub fn scan_script(base: &str, roots: &[String], pattern: &str, recursive: bool) -> String {
    let roots = roots.iter().map(|r| quote(r)).collect::<Vec<_>>().join(", ");
    format!(
        r#"$ErrorActionPreference = 'Stop'
{format_size}
$base = {base}
if (-not (Test-Path -LiteralPath $base -PathType Container)) {{ throw "Directory not found: $base" }}
$results = [System.Collections.Generic.List[object]]::new()
foreach ($root in @({roots})) {{
    if (-not (Test-Path -LiteralPath $root -PathType Container)) {{
        Write-Warning "Directory not found: $root"
        continue
    }}
    $files = Get-ChildItem -LiteralPath $root -Filter {pattern} -Recurse:{recurse} -File -ErrorAction SilentlyContinue
    foreach ($file in $files) {{
        try {{
            $info = [System.Diagnostics.FileVersionInfo]::GetVersionInfo($file.FullName)
            $relative = $file.FullName
            if ($relative.StartsWith($base, [StringComparison]::OrdinalIgnoreCase)) {{
                $relative = $relative.Substring($base.Length).TrimStart('\')
            }}
            $results.Add([PSCustomObject]@{{
                Name = $file.Name
                FullPath = $file.FullName
                RelativePath = $relative
                SizeBytes = $file.Length
                SizeDisplay = Format-Size $file.Length
                LastModified = $file.LastWriteTime.ToString('yyyy-MM-ddTHH:mm:ss')
                FileMajorPart = $info.FileMajorPart
                FileMinorPart = $info.FileMinorPart
                FileBuildPart = $info.FileBuildPart
                FilePrivatePart = $info.FilePrivatePart
                FileDescription = $info.FileDescription
                CompanyName = $info.CompanyName
                ProductName = $info.ProductName
            }})
        }} catch {{
            Write-Warning "Failed to read file: $($file.FullName)"
        }}
    }}
}}
if ($results.Count -eq 0) {{ '[]' }} else {{ ConvertTo-Json -InputObject ($results.ToArray()) -Depth 3 -Compress }}
"#,
        format_size = FORMAT_SIZE_FN.trim(),
        base = quote(base.trim_end_matches(['\\', '/'])),
        roots = roots,
        pattern = quote(pattern),
        recurse = bool_literal(recursive),
    )
}

/// 直接子目录完整路径，按名称排序
pub fn list_directories_script(path: &str) -> String {
    format!(
        r#"$ErrorActionPreference = 'Stop'
$dirs = @(Get-ChildItem -LiteralPath {path} -Directory | Sort-Object Name | ForEach-Object {{ $_.FullName }})
if ($dirs.Count -eq 0) {{ '[]' }} else {{ ConvertTo-Json -InputObject $dirs -Compress }}
"#,
        path = quote(path)
    )
}

/// 连接测试
pub fn probe_script() -> &'static str {
    "hostname"
}

/// 目录是否存在及其中 exe 数量
pub fn validate_directory_script(path: &str) -> String {
    format!(
        r#"$path = {path}
$exists = Test-Path -LiteralPath $path -PathType Container
$count = 0
if ($exists) {{ $count = @(Get-ChildItem -LiteralPath $path -Filter '*.exe' -Recurse -File -ErrorAction SilentlyContinue).Count }}
ConvertTo-Json -InputObject ([PSCustomObject]@{{ Path = $path; Exists = $exists; ExeCount = $count }}) -Compress
"#,
        path = quote(path)
    )
}

/// 在常用位置查找同名目录，返回第一个命中
pub fn find_directory_script(name: &str) -> String {
    format!(
        r#"$name = {name}
$candidates = @(
    (Join-Path ([Environment]::GetFolderPath('Desktop')) $name),
    (Join-Path ([Environment]::GetFolderPath('MyDocuments')) $name),
    (Join-Path (Join-Path $env:USERPROFILE 'Downloads') $name),
    (Join-Path 'C:\' $name),
    (Join-Path 'D:\' $name)
)
$found = $null
foreach ($candidate in $candidates) {{
    if (Test-Path -LiteralPath $candidate -PathType Container) {{ $found = $candidate; break }}
}}
$count = 0
if ($found) {{ $count = @(Get-ChildItem -LiteralPath $found -Filter '*.exe' -Recurse -File -ErrorAction SilentlyContinue).Count }}
ConvertTo-Json -InputObject ([PSCustomObject]@{{ Path = $found; Exists = [bool]$found; ExeCount = $count; Searched = $candidates }}) -Compress
"#,
        name = quote(name)
    )
}

/// Application 日志中的连接事件 ID
pub const CONNECTION_EVENT_ID: u32 = 1001;

/// 在远程主机的 Application 日志写入一条连接记录，失败时返回 Success = $false
pub fn connection_event_script(user: &str, origin: &str) -> String {
    format!(
        r#"try {{
    $hostname = $env:COMPUTERNAME
    $logTime = Get-Date -Format 'yyyy-MM-dd HH:mm:ss'
    $source = 'Application'
    $message = "versionscan remote connection`r`n" +
        "Time: $logTime`r`n" +
        "Host: $hostname`r`n" +
        "Session user: $env:USERNAME`r`n" +
        "Remote user: " + {user} + "`r`n" +
        "Target: " + {origin} + "`r`n" +
        "Purpose: executable version scan"
    Write-EventLog -LogName Application -Source $source -EventId {event_id} -EntryType Information -Message $message -ErrorAction Stop
    $result = [PSCustomObject]@{{ Success = $true; Hostname = $hostname; LogTime = $logTime; SourceUsed = $source }}
}} catch {{
    $result = [PSCustomObject]@{{ Success = $false; Hostname = $env:COMPUTERNAME; Error = $_.Exception.Message }}
}}
ConvertTo-Json -InputObject $result -Compress
"#,
        user = quote(user),
        origin = quote(origin),
        event_id = CONNECTION_EVENT_ID,
    )
}
